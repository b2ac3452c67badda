pub mod batched_pipeline_executor;
pub mod ordered_worker_pool;
