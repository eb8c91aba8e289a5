mod error;
mod model;
mod pool;
mod sink;
mod timer;

pub mod load;

pub use self::{
    error::Error,
    load::{LoadFlags, Loader},
    model::{Material, Mesh, Model, ModelLod, Vertex, VertexKey},
    pool::{Completion, ThreadPool},
    sink::{LogSink, Severity, StandardSink},
    timer::Timer,
};
