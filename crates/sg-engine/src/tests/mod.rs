use crate::async_core;
use crate::async_details_core;

async_core! {
    mod async_tests;
}
async_details_core! {
    mod async_details_tests;
}
