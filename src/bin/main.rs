#[cfg(not(target_arch = "wasm32"))]
mod native {
    extern crate board;

    use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
    use board::core::db::{init_demo_data, MemoryStore};

    mod adapter {
        use actix_web::HttpRequest;
        use spin_sdk::http::{Method, Request, Response};

        /// Response headers the board sets.
        const FORWARDED_HEADERS: [&str; 3] = ["content-type", "location", "set-cookie"];

        pub fn actix_to_spin_request(req: &HttpRequest, body: actix_web::web::Bytes) -> Request {
            let method = match req.method().as_str() {
                "GET" => Method::Get,
                "POST" => Method::Post,
                "PUT" => Method::Put,
                "DELETE" => Method::Delete,
                "HEAD" => Method::Head,
                "OPTIONS" => Method::Options,
                "PATCH" => Method::Patch,
                other => Method::Other(other.to_string()),
            };

            let mut builder = Request::builder();
            builder.method(method).uri(req.uri().to_string());
            for (name, value) in req.headers() {
                if let Ok(val_str) = value.to_str() {
                    builder.header(name.as_str().to_lowercase(), val_str);
                }
            }
            builder.body(body.to_vec()).build()
        }

        pub fn spin_to_actix_response(spin_resp: Response) -> actix_web::HttpResponse {
            let status = actix_web::http::StatusCode::from_u16(*spin_resp.status())
                .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
            let mut response = actix_web::HttpResponse::build(status);

            for name in FORWARDED_HEADERS {
                if let Some(value) = spin_resp.header(name).and_then(|v| v.as_str()) {
                    response.append_header((name, value.to_string()));
                }
            }

            response.body(spin_resp.body().to_vec())
        }
    }

    pub async fn run() -> std::io::Result<()> {
        board::init_tracing();

        let store = web::Data::new(MemoryStore::new());
        if board::config::seed_data_enabled() {
            if let Err(err) = init_demo_data(store.get_ref()) {
                tracing::error!(error = %err, "seeding demo data failed");
            }
        }

        let addr = board::config::bind_address();
        tracing::info!(%addr, "server listening");

        HttpServer::new(move || {
            App::new()
                .app_data(store.clone())
                .default_service(web::route().to(handle_all))
        })
        .bind(addr)?
        .run()
        .await
    }

    async fn handle_all(req: HttpRequest, body: web::Bytes, store: web::Data<MemoryStore>) -> HttpResponse {
        let spin_req = adapter::actix_to_spin_request(&req, body);

        // Password hashing is CPU bound, keep it off the async workers.
        match web::block(move || board::handle_request(store.get_ref(), &spin_req)).await {
            Ok(spin_resp) => adapter::spin_to_actix_response(spin_resp),
            Err(err) => {
                tracing::error!(error = %err, "blocking handler failed");
                HttpResponse::InternalServerError().json(serde_json::json!({"error": "Internal server error"}))
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    native::run().await
}

#[cfg(target_arch = "wasm32")]
fn main() {}
