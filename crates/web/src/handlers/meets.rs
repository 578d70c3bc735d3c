use actix_web::{web, HttpResponse};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use validator::Validate;

use engine::ranking;
use storage::models::{Athlete, Flight, Group, Lift, Meet, MeetType, Registration};
use storage::repository::{
    AthleteRepository, AttemptRepository, CategoryRepository, FlightRepository, LiftRepository,
    MeetRepository, RegistrationRepository,
};
use storage::Database;

use crate::error::{WebError, WebResult};
use crate::handlers::meet_by_code;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMeetRequest {
    #[validate(length(min = 1, message = "code must not be empty"))]
    pub code: String,
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub meet_date: NaiveDate,
    /// regional | national
    pub level: String,
    pub regulation: Option<String>,
    pub meet_type_id: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRegistrationRequest {
    #[validate(length(min = 1, message = "cf must not be empty"))]
    pub cf: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// M or F; required when the athlete is not yet known
    pub sex: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct WeighInRequest {
    #[validate(range(min = 0.0, message = "bodyweight must be non-negative"))]
    pub bodyweight: f64,
    pub weight_cat_id: Option<i64>,
    pub age_cat_id: Option<i64>,
    pub rack_setting: Option<String>,
    pub belt_setting: Option<String>,
    /// Declared openers keyed by lift code.
    #[serde(default)]
    pub openers: HashMap<String, f64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateFlightRequest {
    #[validate(length(min = 1))]
    pub name: String,
    pub ord: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1))]
    pub name: String,
    pub ord: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddEntryRequest {
    pub registration_id: i64,
    pub start_ord: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EntryDetail {
    pub start_ord: i64,
    pub registration: Registration,
    pub athlete: Athlete,
    pub attempts: Vec<storage::models::Attempt>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GroupDetail {
    pub group: Group,
    pub entries: Vec<EntryDetail>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FlightDetail {
    pub flight: Flight,
    pub groups: Vec<GroupDetail>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeetDetailResponse {
    pub meet: Meet,
    pub lifts: Vec<Lift>,
    pub flights: Vec<FlightDetail>,
}

#[utoipa::path(
    get,
    path = "/api/meets",
    responses((status = 200, description = "List all meets", body = Vec<Meet>)),
    tag = "meets"
)]
pub async fn list_meets(db: web::Data<Database>) -> WebResult<HttpResponse> {
    let meets = MeetRepository::new(db.pool()).list().await?;
    Ok(HttpResponse::Ok().json(meets))
}

#[utoipa::path(
    get,
    path = "/api/meets/{code}",
    responses(
        (status = 200, description = "Meet with flights, groups and attempts", body = MeetDetailResponse),
        (status = 404, description = "Unknown meet code")
    ),
    tag = "meets"
)]
pub async fn get_meet(db: web::Data<Database>, path: web::Path<String>) -> WebResult<HttpResponse> {
    let meet = meet_by_code(&db, &path).await?;
    let pool = db.pool();

    let lifts = MeetRepository::new(pool).lift_sequence(meet.meet_id).await?;
    let flight_repo = FlightRepository::new(pool);
    let registrations = RegistrationRepository::new(pool);
    let athletes = AthleteRepository::new(pool);
    let attempts = AttemptRepository::new(pool);

    let mut flights = Vec::new();
    for flight in flight_repo.flights_for_meet(meet.meet_id).await? {
        let mut groups = Vec::new();
        for group in flight_repo.groups_for_flight(flight.flight_id).await? {
            let mut entries = Vec::new();
            for entry in flight_repo.entries_for_group(group.group_id).await? {
                let registration = registrations.find_by_id(entry.registration_id).await?;
                let athlete = athletes.find_by_id(registration.athlete_id).await?;
                let mut entry_attempts = Vec::new();
                for lift in &lifts {
                    entry_attempts.extend(
                        attempts
                            .attempts_for(entry.registration_id, lift.lift_id)
                            .await?,
                    );
                }
                entries.push(EntryDetail {
                    start_ord: entry.start_ord,
                    registration,
                    athlete,
                    attempts: entry_attempts,
                });
            }
            groups.push(GroupDetail { group, entries });
        }
        flights.push(FlightDetail { flight, groups });
    }

    Ok(HttpResponse::Ok().json(MeetDetailResponse { meet, lifts, flights }))
}

#[utoipa::path(
    post,
    path = "/api/meets",
    request_body = CreateMeetRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Meet created", body = Meet),
        (status = 409, description = "Meet code already exists")
    ),
    tag = "meets"
)]
pub async fn create_meet(
    db: web::Data<Database>,
    body: web::Json<CreateMeetRequest>,
) -> WebResult<HttpResponse> {
    body.validate()?;
    let meet = MeetRepository::new(db.pool())
        .create(
            &body.code,
            &body.name,
            body.meet_date,
            &body.level,
            body.regulation.as_deref(),
            body.meet_type_id,
        )
        .await?;
    Ok(HttpResponse::Created().json(meet))
}

#[utoipa::path(
    post,
    path = "/api/meets/{code}/registrations",
    request_body = CreateRegistrationRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Registration created", body = Registration),
        (status = 409, description = "Athlete already registered")
    ),
    tag = "meets"
)]
pub async fn create_registration(
    db: web::Data<Database>,
    path: web::Path<String>,
    body: web::Json<CreateRegistrationRequest>,
) -> WebResult<HttpResponse> {
    body.validate()?;
    let meet = meet_by_code(&db, &path).await?;
    let athletes = AthleteRepository::new(db.pool());

    let athlete = match athletes.find_by_cf(&body.cf).await {
        Ok(existing) => existing,
        Err(storage::error::StorageError::NotFound) => {
            let (first, last, sex, birth_date) = match (
                &body.first_name,
                &body.last_name,
                &body.sex,
                body.birth_date,
            ) {
                (Some(f), Some(l), Some(s), Some(d)) => (f, l, s, d),
                _ => {
                    return Err(WebError::BadRequest(
                        "unknown CF: first_name, last_name, sex and birth_date are required"
                            .into(),
                    ))
                }
            };
            let sex = sex.parse().map_err(WebError::BadRequest)?;
            athletes.create(&body.cf, first, last, sex, birth_date).await?
        }
        Err(e) => return Err(e.into()),
    };

    let registration = RegistrationRepository::new(db.pool())
        .create(meet.meet_id, athlete.athlete_id)
        .await?;
    Ok(HttpResponse::Created().json(registration))
}

#[utoipa::path(
    put,
    path = "/api/registrations/{id}/weigh-in",
    request_body = WeighInRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Weigh-in recorded", body = Registration),
        (status = 400, description = "Weight not divisible by 0.5 kg")
    ),
    tag = "meets"
)]
pub async fn weigh_in(
    db: web::Data<Database>,
    path: web::Path<i64>,
    body: web::Json<WeighInRequest>,
) -> WebResult<HttpResponse> {
    body.validate()?;
    let registration_id = path.into_inner();
    let registrations = RegistrationRepository::new(db.pool());
    let lifts = LiftRepository::new(db.pool());

    // Assigned categories must exist before they land on the registration.
    let categories = CategoryRepository::new(db.pool());
    if let Some(id) = body.weight_cat_id {
        categories.weight_by_id(id).await?;
    }
    if let Some(id) = body.age_cat_id {
        categories.age_by_id(id).await?;
    }

    let registration = registrations
        .weigh_in(
            registration_id,
            body.bodyweight,
            body.weight_cat_id,
            body.age_cat_id,
            body.rack_setting.as_deref(),
            body.belt_setting.as_deref(),
        )
        .await?;

    for (lift_code, kg) in &body.openers {
        let lift = lifts.find_by_code(lift_code).await?;
        registrations
            .set_opener(registration_id, lift.lift_id, *kg)
            .await?;
    }

    Ok(HttpResponse::Ok().json(registration))
}

pub async fn create_flight(
    db: web::Data<Database>,
    path: web::Path<String>,
    body: web::Json<CreateFlightRequest>,
) -> WebResult<HttpResponse> {
    body.validate()?;
    let meet = meet_by_code(&db, &path).await?;
    let flight = FlightRepository::new(db.pool())
        .create_flight(meet.meet_id, &body.name, body.ord)
        .await?;
    Ok(HttpResponse::Created().json(flight))
}

pub async fn create_group(
    db: web::Data<Database>,
    path: web::Path<i64>,
    body: web::Json<CreateGroupRequest>,
) -> WebResult<HttpResponse> {
    body.validate()?;
    let group = FlightRepository::new(db.pool())
        .create_group(path.into_inner(), &body.name, body.ord)
        .await?;
    Ok(HttpResponse::Created().json(group))
}

pub async fn add_group_entry(
    db: web::Data<Database>,
    path: web::Path<i64>,
    body: web::Json<AddEntryRequest>,
) -> WebResult<HttpResponse> {
    let entry = FlightRepository::new(db.pool())
        .add_entry(path.into_inner(), body.registration_id, body.start_ord)
        .await?;
    Ok(HttpResponse::Created().json(entry))
}

#[utoipa::path(
    get,
    path = "/api/lifts",
    responses((status = 200, description = "Lift catalog", body = Vec<Lift>)),
    tag = "meets"
)]
pub async fn list_lifts(db: web::Data<Database>) -> WebResult<HttpResponse> {
    let lifts = LiftRepository::new(db.pool()).list().await?;
    Ok(HttpResponse::Ok().json(lifts))
}

#[utoipa::path(
    get,
    path = "/api/meet-types",
    responses((status = 200, description = "Known meet formats", body = Vec<MeetType>)),
    tag = "meets"
)]
pub async fn list_meet_types(db: web::Data<Database>) -> WebResult<HttpResponse> {
    let meet_types = MeetRepository::new(db.pool()).meet_types().await?;
    Ok(HttpResponse::Ok().json(meet_types))
}

#[utoipa::path(
    get,
    path = "/api/meets/{code}/rankings",
    responses((status = 200, description = "Category and absolute rankings")),
    tag = "meets"
)]
pub async fn get_rankings(
    db: web::Data<Database>,
    path: web::Path<String>,
) -> WebResult<HttpResponse> {
    let meet = meet_by_code(&db, &path).await?;
    let rankings = ranking::rankings_for(db.get_ref(), meet.meet_id).await?;
    Ok(HttpResponse::Ok().json(rankings))
}
