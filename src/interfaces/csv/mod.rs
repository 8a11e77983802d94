pub mod run_reader;
