pub mod batch_request;
