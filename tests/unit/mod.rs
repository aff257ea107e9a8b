mod codec_props;
mod helpers;
mod scenario_tests;
mod sync_tests;
