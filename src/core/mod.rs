pub mod importer;
pub mod seeder;
pub mod timeseries;
