use rocket::Route;

mod voter;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(voter::routes());
    routes
}
