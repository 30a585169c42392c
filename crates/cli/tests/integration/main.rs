mod common;

mod bundle_tests;
mod layer_tests;
