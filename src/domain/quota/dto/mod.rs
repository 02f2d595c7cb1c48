pub mod quota_dto;
