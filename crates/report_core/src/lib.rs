pub mod domain;
pub mod ports;

pub use domain::{
    Chat, ChatPage, EmployeeStat, GenerateRequest, NewReport, RecentReport, RenderContext, Report,
    ReportFilter, ReportPage, ReportStatistics,
};
pub use ports::{
    ChatStore, PortError, PortResult, ReportStore, TagIssue, TemplateInspection, TemplateRenderer,
};
