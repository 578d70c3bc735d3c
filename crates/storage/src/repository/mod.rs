pub mod athletes;
pub mod attempts;
pub mod categories;
pub mod current_state;
pub mod flights;
pub mod lifts;
pub mod meets;
pub mod ranking;
pub mod registrations;

pub use athletes::AthleteRepository;
pub use attempts::{AttemptRepository, RoundCandidate};
pub use categories::CategoryRepository;
pub use current_state::CurrentStateRepository;
pub use flights::FlightRepository;
pub use lifts::LiftRepository;
pub use meets::MeetRepository;
pub use ranking::{LiftBest, RankingRepository, RankingRow};
pub use registrations::RegistrationRepository;
