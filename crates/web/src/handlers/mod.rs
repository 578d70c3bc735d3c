pub mod athletes;
pub mod live;
pub mod meets;

use actix_web::web;

use crate::error::WebResult;
use storage::models::Meet;
use storage::repository::MeetRepository;
use storage::Database;

pub(crate) async fn meet_by_code(db: &web::Data<Database>, code: &str) -> WebResult<Meet> {
    Ok(MeetRepository::new(db.pool()).find_by_code(code).await?)
}
