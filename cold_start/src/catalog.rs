use std::{collections::HashSet, fmt::Display};

use serde::Deserialize;

/// An app that can be launched on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDescriptor {
    pub package: String,
    pub activity: String,
    pub display_name: Option<String>,
}

impl AppDescriptor {
    /// Parses a `package/activity` component as accepted by `am start`.
    pub fn from_component(component: &str) -> Result<AppDescriptor, CatalogError> {
        match component.split_once('/') {
            Some((package, activity)) if !package.is_empty() && !activity.is_empty() => {
                Ok(AppDescriptor {
                    package: package.to_owned(),
                    activity: activity.to_owned(),
                    display_name: None,
                })
            }
            _ => Err(CatalogError::InvalidComponent {
                component: component.to_owned(),
            }),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> AppDescriptor {
        self.display_name = Some(name.into());
        self
    }

    pub fn component(&self) -> String {
        format!("{}/{}", self.package, self.activity)
    }

    /// Display name, falling back to the package.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.package)
    }
}

impl Display for AppDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.package)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CatalogError {
    #[error("Invalid component '{component}', expected 'package/activity'")]
    InvalidComponent { component: String },

    #[error("Package '{package}' is listed as both moderate- and large-footprint app")]
    OverlappingTiers { package: String },

    #[error("Package '{package}' is listed more than once")]
    DuplicatePackage { package: String },

    #[error("The {tier} catalog is empty")]
    EmptyTier { tier: &'static str },

    #[error("No catalog app matches '{query}'")]
    UnknownApp { query: String },
}

/// Catalog entry as written in a configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    pub component: String,
    pub name: Option<String>,
}

impl TryFrom<&CatalogEntry> for AppDescriptor {
    type Error = CatalogError;

    fn try_from(entry: &CatalogEntry) -> Result<Self, Self::Error> {
        let app = AppDescriptor::from_component(&entry.component)?;
        Ok(match &entry.name {
            Some(name) => app.with_name(name),
            None => app,
        })
    }
}

/// The apps used either as background load or as measurement targets.
///
/// Moderate-footprint apps only ever serve as background load. Large-footprint
/// apps are the measurement targets and serve as additional load in the heavy
/// tier. A package belongs to at most one of the two lists.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    moderate: Vec<AppDescriptor>,
    large: Vec<AppDescriptor>,
}

impl Catalog {
    pub fn new(
        moderate: Vec<AppDescriptor>,
        large: Vec<AppDescriptor>,
    ) -> Result<Catalog, CatalogError> {
        if moderate.is_empty() {
            return Err(CatalogError::EmptyTier { tier: "moderate" });
        }
        if large.is_empty() {
            return Err(CatalogError::EmptyTier { tier: "large" });
        }

        let moderate_packages = unique_packages(&moderate)?;
        unique_packages(&large)?;
        if let Some(package) = large
            .iter()
            .map(|app| app.package.as_str())
            .find(|package| moderate_packages.contains(package))
        {
            return Err(CatalogError::OverlappingTiers {
                package: package.to_owned(),
            });
        }

        Ok(Catalog { moderate, large })
    }

    pub fn from_entries(
        moderate: &[CatalogEntry],
        large: &[CatalogEntry],
    ) -> Result<Catalog, CatalogError> {
        let moderate = moderate
            .iter()
            .map(AppDescriptor::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let large = large
            .iter()
            .map(AppDescriptor::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Catalog::new(moderate, large)
    }

    pub fn moderate(&self) -> &[AppDescriptor] {
        &self.moderate
    }

    pub fn large(&self) -> &[AppDescriptor] {
        &self.large
    }

    /// Large-footprint apps first, then moderate-footprint apps.
    pub fn all_apps(&self) -> impl Iterator<Item = &AppDescriptor> {
        self.large.iter().chain(self.moderate.iter())
    }

    /// Finds an app by package or display name (case-insensitive for names).
    pub fn find(&self, query: &str) -> Option<&AppDescriptor> {
        self.all_apps()
            .find(|app| app.package == query)
            .or_else(|| {
                self.all_apps().find(|app| {
                    app.display_name
                        .as_deref()
                        .is_some_and(|name| name.eq_ignore_ascii_case(query))
                })
            })
    }

    /// Resolves a command line target: a known app, or any `package/activity`
    /// component.
    pub fn resolve(&self, query: &str) -> Result<AppDescriptor, CatalogError> {
        if let Some(app) = self.find(query) {
            return Ok(app.clone());
        }
        if query.contains('/') {
            let app = AppDescriptor::from_component(query)?;
            return Ok(match self.find(&app.package) {
                Some(known) if known.activity == app.activity => known.clone(),
                _ => app,
            });
        }
        Err(CatalogError::UnknownApp {
            query: query.to_owned(),
        })
    }

    /// Narrows the large-footprint targets to the given packages or names while
    /// keeping catalog order. An empty filter selects all targets.
    pub fn targets(&self, filter: &[String]) -> Result<Vec<&AppDescriptor>, CatalogError> {
        if filter.is_empty() {
            return Ok(self.large.iter().collect());
        }
        let mut wanted = HashSet::new();
        for query in filter {
            let app = self
                .large
                .iter()
                .find(|app| {
                    app.package == *query
                        || app
                            .display_name
                            .as_deref()
                            .is_some_and(|name| name.eq_ignore_ascii_case(query))
                })
                .ok_or_else(|| CatalogError::UnknownApp {
                    query: query.clone(),
                })?;
            wanted.insert(app.package.as_str());
        }
        Ok(self
            .large
            .iter()
            .filter(|app| wanted.contains(app.package.as_str()))
            .collect())
    }
}

fn unique_packages(apps: &[AppDescriptor]) -> Result<HashSet<&str>, CatalogError> {
    let mut packages = HashSet::new();
    for app in apps {
        if !packages.insert(app.package.as_str()) {
            return Err(CatalogError::DuplicatePackage {
                package: app.package.clone(),
            });
        }
    }
    Ok(packages)
}

const MODERATE_APPS: &[(&str, &str)] = &[
    ("com.whatsapp/com.whatsapp.Main", "WhatsApp"),
    (
        "com.amazon.mShop.android.shopping/com.amazon.mShop.home.HomeActivity",
        "Amazon",
    ),
    ("org.telegram.messenger/org.telegram.ui.LaunchActivity", "Telegram"),
    ("us.zoom.videomeetings/com.zipow.videobox.LauncherActivity", "Zoom"),
    (
        "com.instagram.android/com.instagram.android.activity.MainTabActivity",
        "Instagram",
    ),
    (
        "jp.naver.line.android/jp.naver.line.android.activity.SplashActivity",
        "Line",
    ),
    (
        "com.google.android.apps.maps/com.google.android.maps.MapsActivity",
        "GoogleMaps",
    ),
    (
        "com.google.android.apps.docs.editors.docs/com.google.android.apps.docs.app.NewMainProxyActivity",
        "GoogleDocs",
    ),
    (
        "com.google.android.gm/com.google.android.gm.ConversationListActivityGmail",
        "Gmail",
    ),
    ("com.facebook.katana/com.facebook.katana.LoginActivity", "Facebook"),
    (
        "com.quora.android/com.quora.android.components.activities.LauncherActivity",
        "Quora",
    ),
    ("com.reddit.frontpage/launcher.default", "Reddit"),
    (
        "com.linkedin.android/com.linkedin.android.infra.navigation.MainActivity",
        "LinkedIn",
    ),
    ("com.adobe.reader/.AdobeReader", "AdobeReader"),
    ("com.openai.chatgpt/com.openai.chatgpt.MainActivity", "ChatGPT"),
];

const LARGE_APPS: &[(&str, &str)] = &[
    ("com.booking/com.booking.startup.HomeActivity", "Booking"),
    ("com.tencent.ig/com.epicgames.ue4.SplashActivity", "PUBG"),
    ("com.adobe.psmobile/com.adobe.psmobile.SplashScreen", "Photoshop"),
    ("com.twitter.android/com.twitter.android.StartActivity", "Twitter"),
    (
        "com.zhiliaoapp.musically/com.ss.android.ugc.aweme.splash.SplashActivity",
        "TikTok",
    ),
    ("com.xingin.xhs/com.xingin.xhs.index.v2.IndexActivityV2", "RedNote"),
    ("com.lemon.lvoverseas/com.vega.main.MainActivity", "Capcut"),
    (
        "com.campmobile.snow/com.linecorp.b612.android.activity.ActivityCamera",
        "Snow",
    ),
    (
        "com.google.earth/com.google.android.apps.earth.flutter.EarthFlutterActivity",
        "GoogleEarth",
    ),
    ("com.roblox.client/com.roblox.client.startup.ActivitySplash", "Roblox"),
    (
        "com.tinder/com.tinder.launch.internal.activities.LoginActivity",
        "Tinder",
    ),
    (
        "com.einnovation.temu/com.baogong.splash.activity.MainFrameActivity",
        "Temu",
    ),
    (
        "com.ubercab/com.ubercab.presidio.app.core.root.RootActivity",
        "Uber",
    ),
];

fn builtin_apps(apps: &[(&str, &str)]) -> Vec<AppDescriptor> {
    apps.iter()
        .map(|(component, name)| {
            let (package, activity) = component.split_once('/').unwrap_or((*component, ""));
            AppDescriptor {
                package: package.to_string(),
                activity: activity.to_string(),
                display_name: Some(name.to_string()),
            }
        })
        .collect()
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog {
            moderate: builtin_apps(MODERATE_APPS),
            large: builtin_apps(LARGE_APPS),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn app(component: &str) -> AppDescriptor {
        AppDescriptor::from_component(component).unwrap()
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = Catalog::default();
        assert_eq!(catalog.moderate().len(), 15);
        assert_eq!(catalog.large().len(), 13);
        let revalidated = Catalog::new(catalog.moderate().to_vec(), catalog.large().to_vec());
        assert_eq!(revalidated, Ok(catalog.clone()));
        assert!(catalog.all_apps().all(|app| !app.activity.is_empty()));
    }

    #[test]
    fn parse_component() {
        let reader = app("com.adobe.reader/.AdobeReader");
        assert_eq!(reader.package, "com.adobe.reader");
        assert_eq!(reader.activity, ".AdobeReader");
        assert_eq!(reader.component(), "com.adobe.reader/.AdobeReader");
        assert_eq!(reader.name(), "com.adobe.reader");

        assert!(AppDescriptor::from_component("com.adobe.reader").is_err());
        assert!(AppDescriptor::from_component("/.AdobeReader").is_err());
        assert!(AppDescriptor::from_component("com.adobe.reader/").is_err());
    }

    #[test]
    fn display_name_defaults_to_package() {
        let named = app("com.booking/com.booking.startup.HomeActivity").with_name("Booking");
        assert_eq!(named.name(), "Booking");
        assert_eq!(named.to_string(), "Booking (com.booking)");
    }

    #[test]
    fn rejects_overlapping_tiers() {
        let result = Catalog::new(
            vec![app("a.b/.Main"), app("c.d/.Main")],
            vec![app("e.f/.Main"), app("c.d/.Other")],
        );
        assert_eq!(
            result,
            Err(CatalogError::OverlappingTiers {
                package: "c.d".to_string()
            })
        );
    }

    #[test]
    fn rejects_duplicates_and_empty_tiers() {
        assert_eq!(
            Catalog::new(vec![app("a.b/.Main"), app("a.b/.Main")], vec![app("e.f/.Main")]),
            Err(CatalogError::DuplicatePackage {
                package: "a.b".to_string()
            })
        );
        assert_eq!(
            Catalog::new(vec![], vec![app("e.f/.Main")]),
            Err(CatalogError::EmptyTier { tier: "moderate" })
        );
        assert_eq!(
            Catalog::new(vec![app("a.b/.Main")], vec![]),
            Err(CatalogError::EmptyTier { tier: "large" })
        );
    }

    #[test]
    fn from_config_entries() {
        let moderate = vec![CatalogEntry {
            component: "a.b/.Main".to_string(),
            name: None,
        }];
        let large = vec![CatalogEntry {
            component: "e.f/.Main".to_string(),
            name: Some("Ef".to_string()),
        }];
        let catalog = Catalog::from_entries(&moderate, &large).unwrap();
        assert_eq!(catalog.large()[0].name(), "Ef");
        assert_eq!(catalog.moderate()[0].name(), "a.b");
    }

    #[test]
    fn resolve_targets() {
        let catalog = Catalog::default();
        assert_eq!(catalog.resolve("com.tinder").unwrap().name(), "Tinder");
        assert_eq!(catalog.resolve("tiktok").unwrap().package, "com.zhiliaoapp.musically");
        assert_eq!(catalog.resolve("com.whatsapp").unwrap().name(), "WhatsApp");

        let custom = catalog.resolve("org.example/.Main").unwrap();
        assert_eq!(custom.component(), "org.example/.Main");
        assert_eq!(custom.display_name, None);

        let known = catalog
            .resolve("com.booking/com.booking.startup.HomeActivity")
            .unwrap();
        assert_eq!(known.name(), "Booking");

        assert_eq!(
            catalog.resolve("nope"),
            Err(CatalogError::UnknownApp {
                query: "nope".to_string()
            })
        );
    }

    #[test]
    fn filter_targets_keeps_catalog_order() {
        let catalog = Catalog::default();
        let targets = catalog
            .targets(&["Uber".to_string(), "com.booking".to_string()])
            .unwrap();
        let names: Vec<_> = targets.iter().map(|app| app.name()).collect();
        assert_eq!(names, vec!["Booking", "Uber"]);

        assert_eq!(catalog.targets(&[]).unwrap().len(), 13);
        // Moderate-footprint apps are never targets.
        assert!(catalog.targets(&["WhatsApp".to_string()]).is_err());
    }
}
