mod gitops_service;

pub use gitops_service::*;
