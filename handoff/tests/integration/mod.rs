mod channel_test;
mod counter_test;
mod pipeline_test;
mod shutdown_test;
