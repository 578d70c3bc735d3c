use actix_web::web;

pub mod athletes;
pub mod live;
pub mod meets;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(live::configure)
            .configure(meets::configure)
            .configure(athletes::configure),
    );
}
