mod helpers;


#[cfg(feature = "stress")]
mod concurrency;
