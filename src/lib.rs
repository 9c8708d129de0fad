pub mod atlas;
pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod input;
pub mod manifest;
pub mod pipeline;
pub mod processing {
    pub mod decode;
    pub mod flatten;
    pub mod normalize;
}
pub mod tasks {
    pub mod fetcher;
    pub mod packer;
    pub mod writer;
}
