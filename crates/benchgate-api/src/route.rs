//! `/ci` path grammar.
//!
//! Every request under the mount is parsed once into a [`Route`]. Handlers
//! match on the variant and never look at the raw path again.

/// Terminal endpoints reachable through the console verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleKind {
    Host,
    Bios,
    Bmc,
    OsLoader,
    BiosBuild,
    BmcBuild,
}

/// Verbs whose full path is relayed as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughKind {
    /// Build status, served by the compile companion.
    IsRunning,
    IsEmulatorsPool,
    ResetEmulator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerVerb {
    PowerOn,
    PowerOff,
    StartSmbios,
    StartBmc,
}

impl PowerVerb {
    /// Control-endpoint paths to hit, in order.
    pub fn control_paths(self) -> &'static [&'static str] {
        match self {
            PowerVerb::PowerOn => &["/poweron"],
            PowerVerb::PowerOff => &["/poweroff"],
            PowerVerb::StartSmbios => &["/startsmbios"],
            PowerVerb::StartBmc => &["/startbmc", "/startbmcconsole"],
        }
    }
}

/// Which firmware image a verb concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Firmware {
    Bios,
    Bmc,
}

/// Static asset directories and their content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetClass {
    Js,
    Html,
    Css,
    Images,
    Mp4,
}

impl AssetClass {
    pub fn content_type(self) -> &'static str {
        match self {
            AssetClass::Js => "application/javascript",
            AssetClass::Html => "text/html; charset=utf-8",
            AssetClass::Css => "text/css; charset=utf-8",
            AssetClass::Images => "image/png",
            AssetClass::Mp4 => "video/mp4",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    ServerModels,
    GetServer { product: String },
    StopServer { bench: String },
    /// Listing when `file` is `None`, otherwise a load request.
    OsInstallers { file: Option<String> },
    BmcUp,
    Console { kind: ConsoleKind, segment: String },
    Passthrough { kind: PassthroughKind, tail: String },
    Power(PowerVerb),
    FirmwareUpload { firmware: Firmware, login: String },
    GitToken { login: String },
    Build { firmware: Firmware, login: String, tail: String },
    LoadBuilt { firmware: Firmware, login: String },
    Asset { class: AssetClass, tail: String },
    Unknown,
}

impl Route {
    /// Parse a request path. The `/ci` mount is stripped when present.
    pub fn parse(path: &str) -> Route {
        let tail = path.strip_prefix("/ci").unwrap_or(path);
        if !tail.is_empty() && !tail.starts_with('/') {
            return Route::Unknown;
        }
        let mut segments = tail.split('/').filter(|s| !s.is_empty());
        let Some(verb) = segments.next() else {
            return Route::Home;
        };
        let segment = segments.next().map(str::to_string);
        let tail = tail.to_string();

        let console = |kind| Route::Console {
            kind,
            segment: segment.clone().unwrap_or_default(),
        };
        let asset = |class| Route::Asset {
            class,
            tail: tail.clone(),
        };

        match verb {
            "getServermodels" => Route::ServerModels,
            "getServer" => Route::GetServer {
                product: segment.clone().unwrap_or_default(),
            },
            "stopServer" => Route::StopServer {
                bench: segment.clone().unwrap_or_default(),
            },
            "getosinstallers" => Route::OsInstallers {
                file: segment.clone(),
            },
            "bmcup" => Route::BmcUp,
            "console" => console(ConsoleKind::Host),
            "smbiosconsole" => console(ConsoleKind::Bios),
            "bmcconsole" => console(ConsoleKind::Bmc),
            "osloaderconsole" => console(ConsoleKind::OsLoader),
            "smbiosbuildconsole" => console(ConsoleKind::BiosBuild),
            "bmcbuildconsole" => console(ConsoleKind::BmcBuild),
            "isRunning" => Route::Passthrough {
                kind: PassthroughKind::IsRunning,
                tail: tail.clone(),
            },
            "isEmulatorsPool" => Route::Passthrough {
                kind: PassthroughKind::IsEmulatorsPool,
                tail: tail.clone(),
            },
            "resetEmulator" => Route::Passthrough {
                kind: PassthroughKind::ResetEmulator,
                tail: tail.clone(),
            },
            "poweron" => Route::Power(PowerVerb::PowerOn),
            "poweroff" => Route::Power(PowerVerb::PowerOff),
            "startsmbios" => Route::Power(PowerVerb::StartSmbios),
            "startbmc" => Route::Power(PowerVerb::StartBmc),
            "js" => asset(AssetClass::Js),
            "html" => asset(AssetClass::Html),
            "css" => asset(AssetClass::Css),
            "images" => asset(AssetClass::Images),
            "mp4" => asset(AssetClass::Mp4),
            _ => Self::parse_login_verb(verb, segment.clone(), tail.clone()),
        }
    }

    fn parse_login_verb(verb: &str, login: Option<String>, tail: String) -> Route {
        let Some(login) = login else {
            return Route::Unknown;
        };
        match verb {
            "biosfirmware" => Route::FirmwareUpload {
                firmware: Firmware::Bios,
                login,
            },
            "bmcfirmware" => Route::FirmwareUpload {
                firmware: Firmware::Bmc,
                login,
            },
            "gitToken" => Route::GitToken { login },
            "buildbiosfirmware" => Route::Build {
                firmware: Firmware::Bios,
                login,
                tail,
            },
            "buildbmcfirmware" => Route::Build {
                firmware: Firmware::Bmc,
                login,
                tail,
            },
            "loadbuiltsmbios" => Route::LoadBuilt {
                firmware: Firmware::Bios,
                login,
            },
            "loadbuiltopenbmc" => Route::LoadBuilt {
                firmware: Firmware::Bmc,
                login,
            },
            _ => Route::Unknown,
        }
    }

    /// Whether the route does nothing unless the session holds a bench.
    pub fn needs_lease(&self) -> bool {
        match self {
            Route::Home
            | Route::ServerModels
            | Route::GetServer { .. }
            | Route::StopServer { .. }
            | Route::Asset { .. }
            | Route::Unknown => false,
            Route::OsInstallers { file } => file.is_some(),
            Route::BmcUp
            | Route::Console { .. }
            | Route::Passthrough { .. }
            | Route::Power(_)
            | Route::FirmwareUpload { .. }
            | Route::GitToken { .. }
            | Route::Build { .. }
            | Route::LoadBuilt { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_variants() {
        assert_eq!(Route::parse("/ci"), Route::Home);
        assert_eq!(Route::parse("/ci/"), Route::Home);
        assert_eq!(Route::parse("/ci//"), Route::Home);
        assert_eq!(Route::parse("/cinema"), Route::Unknown);
    }

    #[test]
    fn lease_verbs() {
        assert_eq!(
            Route::parse("/ci/getServer/DL360_Gen10"),
            Route::GetServer {
                product: "DL360_Gen10".to_string()
            }
        );
        assert_eq!(
            Route::parse("/ci/stopServer/ctrl1"),
            Route::StopServer {
                bench: "ctrl1".to_string()
            }
        );
        assert_eq!(Route::parse("/ci/getServermodels"), Route::ServerModels);
    }

    #[test]
    fn os_installers_listing_vs_file() {
        assert_eq!(Route::parse("/ci/getosinstallers/"), Route::OsInstallers { file: None });
        assert_eq!(Route::parse("/ci/getosinstallers"), Route::OsInstallers { file: None });
        assert_eq!(
            Route::parse("/ci/getosinstallers/ubuntu.iso"),
            Route::OsInstallers {
                file: Some("ubuntu.iso".to_string())
            }
        );
        assert!(!Route::parse("/ci/getosinstallers/").needs_lease());
        assert!(Route::parse("/ci/getosinstallers/ubuntu.iso").needs_lease());
    }

    #[test]
    fn consoles_keep_one_segment() {
        assert_eq!(
            Route::parse("/ci/smbiosconsole/ws"),
            Route::Console {
                kind: ConsoleKind::Bios,
                segment: "ws".to_string()
            }
        );
        assert_eq!(
            Route::parse("/ci/console/"),
            Route::Console {
                kind: ConsoleKind::Host,
                segment: String::new()
            }
        );
    }

    #[test]
    fn passthrough_keeps_the_tail() {
        assert_eq!(
            Route::parse("/ci/isRunning/alice"),
            Route::Passthrough {
                kind: PassthroughKind::IsRunning,
                tail: "/isRunning/alice".to_string()
            }
        );
    }

    #[test]
    fn login_verbs_need_a_login() {
        assert_eq!(
            Route::parse("/ci/buildbmcfirmware/alice/main"),
            Route::Build {
                firmware: Firmware::Bmc,
                login: "alice".to_string(),
                tail: "/buildbmcfirmware/alice/main".to_string()
            }
        );
        assert_eq!(
            Route::parse("/ci/gitToken/alice"),
            Route::GitToken {
                login: "alice".to_string()
            }
        );
        assert_eq!(Route::parse("/ci/gitToken"), Route::Unknown);
        assert_eq!(Route::parse("/ci/loadbuiltsmbios/"), Route::Unknown);
        assert_eq!(Route::parse("/ci/whatever/alice"), Route::Unknown);
    }

    #[test]
    fn power_verbs() {
        assert_eq!(Route::parse("/ci/startbmc"), Route::Power(PowerVerb::StartBmc));
        assert_eq!(
            PowerVerb::StartBmc.control_paths(),
            &["/startbmc", "/startbmcconsole"]
        );
        assert!(Route::parse("/ci/poweron").needs_lease());
    }

    #[test]
    fn assets() {
        assert_eq!(
            Route::parse("/ci/css/site.css"),
            Route::Asset {
                class: AssetClass::Css,
                tail: "/css/site.css".to_string()
            }
        );
        assert_eq!(AssetClass::Images.content_type(), "image/png");
    }
}
