pub mod bse_rss;
