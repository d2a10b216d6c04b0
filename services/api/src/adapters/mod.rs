pub mod db;
pub mod renderer;

pub use db::DbAdapter;
pub use renderer::DocxRenderer;
