pub mod answer;
pub mod feedback;
pub mod question;
pub mod session;
