pub mod averages;
pub mod backup;
pub mod classes;
pub mod core;
pub mod grades;
pub mod reports;
pub mod snapshot;
pub mod students;
pub mod subjects;
