pub mod collect_reports;
