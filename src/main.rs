#[macro_use]
extern crate rocket;

use housing_price_api::telemetry;

#[launch]
fn rocket() -> _ {
    telemetry::init_tracing("info");
    housing_price_api::rocket()
}
