pub mod storage_request;
