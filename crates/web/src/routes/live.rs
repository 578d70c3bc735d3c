use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;

use crate::handlers::live;
use crate::middleware::auth::api_key_validator;

pub fn configure(cfg: &mut web::ServiceConfig) {
    let auth = HttpAuthentication::bearer(api_key_validator);

    cfg.service(
        web::scope("/live/{meet_code}")
            .route("/events", web::get().to(live::join_events))
            .route("/state", web::get().to(live::get_state))
            .route("/queue", web::get().to(live::get_queue))
            // Judge commands carry their own signed token.
            .route("/vote", web::post().to(live::cast_vote))
            // Director commands ride behind the admin bearer key.
            .route(
                "/initialize",
                web::post().to(live::initialize).wrap(auth.clone()),
            )
            .route("/next", web::post().to(live::next).wrap(auth.clone()))
            .route("/declare", web::post().to(live::declare).wrap(auth.clone()))
            .route("/timer", web::post().to(live::timer).wrap(auth.clone()))
            .route("/reset", web::post().to(live::reset).wrap(auth.clone()))
            .route(
                "/ballots",
                web::get().to(live::open_ballots).wrap(auth.clone()),
            )
            .route(
                "/judge-token",
                web::post().to(live::issue_judge_token).wrap(auth),
            ),
    );
}
