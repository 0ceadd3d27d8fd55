
use assertables::*;
use gitops_testutils::*;
use httpmock::prelude::*;
use rstest::*;
use tracing_test::traced_test;

use super::*;
use crate::macros::*;
