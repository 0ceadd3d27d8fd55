pub mod argoproj;
pub mod monitoring;
pub mod olm;
pub mod openshift;
pub mod v1alpha1;
