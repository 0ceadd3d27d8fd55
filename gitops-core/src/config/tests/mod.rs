mod resolve_test;

use assertables::*;
use gitops_testutils::*;
use rstest::*;

use super::*;
use crate::prelude::*;
use crate::version::OcpVersion;
