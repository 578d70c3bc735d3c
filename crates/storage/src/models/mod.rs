mod athlete;
mod attempt;
mod category;
mod current_state;
mod flight;
mod lift;
mod meet;
mod registration;

pub use athlete::{Athlete, Sex};
pub use attempt::{Attempt, AttemptStatus};
pub use category::{AgeCategory, WeightCategory};
pub use current_state::{CurrentState, Phase};
pub use flight::{Flight, Group, GroupEntry};
pub use lift::Lift;
pub use meet::{Meet, MeetType};
pub use registration::{Opener, Registration};
