pub mod user_scores;
pub mod users;

pub type User = users::Model;
pub type UserScore = user_scores::Model;
