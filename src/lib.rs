pub mod constants;
pub mod error;
pub mod forecast;
pub mod model;
pub mod server;
#[cfg(test)]
pub mod test;
pub mod util {
    pub mod model_store;
    pub mod normalizer;
}
