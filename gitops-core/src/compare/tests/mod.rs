mod quantity_test;

use assertables::*;
use gitops_testutils::*;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use rstest::*;

use super::*;
use crate::macros::*;
