#[rocket::launch]
fn launch() -> _ {
    forgepulse_api::rocket()
}
