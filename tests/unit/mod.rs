mod concurrency_tests;
mod helpers;
mod invariant_tests;
mod scenario_tests;
