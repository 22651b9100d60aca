/// Declares a `clap` argument group with the logging flags every binary
/// takes. The group's `log_filter` defaults to `$default_filter`.
#[macro_export]
macro_rules! logging_args_with_default_filter {
    ($struct_name:ident, $default_filter:literal) => {
        #[derive(clap::Parser)]
        pub struct $struct_name {
            /// Log filter directives, e.g. `warn,bridge=debug`.
            #[clap(long, env, default_value = $default_filter)]
            pub log_filter: String,

            /// Events at this level or more severe are written to stderr.
            #[clap(long, env, default_value = "error")]
            pub log_stderr_threshold: ::tracing::level_filters::LevelFilter,

            /// Output log events as JSON.
            #[clap(long, env)]
            pub log_json: bool,
        }

        impl $struct_name {
            pub fn observe_config(&self) -> $crate::Config {
                $crate::Config::new(
                    &self.log_filter,
                    self.log_stderr_threshold.into_level(),
                    self.log_json,
                )
            }
        }

        impl ::std::fmt::Display for $struct_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                let Self {
                    log_filter,
                    log_stderr_threshold,
                    log_json,
                } = self;

                writeln!(f, "log_filter: {}", log_filter)?;
                writeln!(f, "log_stderr_threshold: {}", log_stderr_threshold)?;
                writeln!(f, "log_json: {}", log_json)?;
                Ok(())
            }
        }
    };
}
