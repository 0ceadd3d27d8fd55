
use assertables::*;
use gitops_testutils::*;
use rstest::*;

use super::*;
