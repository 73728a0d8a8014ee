pub mod mock_db;
pub mod postgres_user_repository;
pub mod seeder;
pub mod user_repository;
