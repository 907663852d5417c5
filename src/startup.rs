use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{get_account, health_check, login, logout, me, refresh, signup};
use crate::session::SessionManager;

// Request bodies are a handful of short strings.
const MAX_JSON_PAYLOAD: usize = 4 * 1024;

pub fn run(listener: TcpListener, sessions: Arc<SessionManager>) -> Result<Server, std::io::Error> {
    let sessions_data = web::Data::from(sessions.clone());

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(sessions_data.clone())
            .app_data(web::JsonConfig::default().limit(MAX_JSON_PAYLOAD))
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/accounts")
                    // Public routes
                    .route("/signup", web::post().to(signup))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    // Protected routes (bearer access token, account re-checked per request)
                    .service(
                        web::resource("/me")
                            .wrap(JwtMiddleware::new(sessions.clone()))
                            .route(web::get().to(me)),
                    )
                    .service(
                        web::resource("/logout")
                            .wrap(JwtMiddleware::new(sessions.clone()))
                            .route(web::post().to(logout)),
                    )
                    .service(
                        web::resource("/{id}")
                            .wrap(JwtMiddleware::new(sessions.clone()))
                            .route(web::get().to(get_account)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
