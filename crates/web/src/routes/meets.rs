use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;

use crate::handlers::meets;
use crate::middleware::auth::api_key_validator;

pub fn configure(cfg: &mut web::ServiceConfig) {
    let auth = HttpAuthentication::bearer(api_key_validator);

    cfg.service(
        web::scope("/meets")
            .route("", web::get().to(meets::list_meets))
            .route("", web::post().to(meets::create_meet).wrap(auth.clone()))
            .route("/{code}", web::get().to(meets::get_meet))
            .route("/{code}/rankings", web::get().to(meets::get_rankings))
            .route(
                "/{code}/registrations",
                web::post().to(meets::create_registration).wrap(auth.clone()),
            )
            .route(
                "/{code}/flights",
                web::post().to(meets::create_flight).wrap(auth.clone()),
            ),
    );
    cfg.route("/lifts", web::get().to(meets::list_lifts));
    cfg.route("/meet-types", web::get().to(meets::list_meet_types));
    cfg.service(
        web::scope("/registrations").route(
            "/{id}/weigh-in",
            web::put().to(meets::weigh_in).wrap(auth.clone()),
        ),
    );
    cfg.service(
        web::scope("/flights").route(
            "/{id}/groups",
            web::post().to(meets::create_group).wrap(auth.clone()),
        ),
    );
    cfg.service(
        web::scope("/groups").route(
            "/{id}/entries",
            web::post().to(meets::add_group_entry).wrap(auth),
        ),
    );
}
