pub mod monthly_record;
pub mod weekly_point;
pub mod year_month;
