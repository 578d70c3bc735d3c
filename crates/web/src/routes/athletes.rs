use actix_web::web;

use crate::handlers::athletes;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/athletes")
            .route("", web::get().to(athletes::list_athletes))
            .route("/{cf}", web::get().to(athletes::get_athlete)),
    );
}
