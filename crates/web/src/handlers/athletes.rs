use actix_web::{web, HttpResponse};

use storage::models::Athlete;
use storage::repository::AthleteRepository;
use storage::Database;

use crate::error::WebResult;

#[utoipa::path(
    get,
    path = "/api/athletes",
    responses((status = 200, description = "List all athletes", body = Vec<Athlete>)),
    tag = "athletes"
)]
pub async fn list_athletes(db: web::Data<Database>) -> WebResult<HttpResponse> {
    let athletes = AthleteRepository::new(db.pool()).list().await?;
    Ok(HttpResponse::Ok().json(athletes))
}

#[utoipa::path(
    get,
    path = "/api/athletes/{cf}",
    responses(
        (status = 200, description = "Athlete by fiscal code", body = Athlete),
        (status = 404, description = "Unknown CF")
    ),
    tag = "athletes"
)]
pub async fn get_athlete(db: web::Data<Database>, path: web::Path<String>) -> WebResult<HttpResponse> {
    let athlete = AthleteRepository::new(db.pool()).find_by_cf(&path).await?;
    Ok(HttpResponse::Ok().json(athlete))
}
