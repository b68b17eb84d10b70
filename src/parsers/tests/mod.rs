mod html_parser_tests;
mod integration_tests;
mod sitemap_parser_tests;
