use std::future::Future;

use shared_formpost::{FormData, FormPoster, FormResponse, PostError};

fn check<F: Future<Output = Result<FormResponse, PostError>>>(future: F) -> F {
    future
}

fn main() {
    let poster = FormPoster::new();
    let data = FormData::new().field("message", "hello");
    let _future = check(poster.post_form("https://chat.example.com/rooms/lobby", &data));
}
