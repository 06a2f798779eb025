pub mod calendar;
pub mod integrations;

use actix_web::web;

pub fn create_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/calendar").configure(calendar::create_routes))
        .service(web::scope("/integrations").configure(integrations::create_routes));
}
