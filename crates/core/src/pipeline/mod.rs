pub mod infrastructure;
pub mod label_people_use_case;
pub mod pipeline_executor;
pub mod pipeline_logger;
