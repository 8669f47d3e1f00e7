// Access/refresh token cookies

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::config::CookieConfig;

#[derive(Debug, Clone)]
pub struct CookieSettings {
    config: CookieConfig,
}

impl CookieSettings {
    pub fn new(config: CookieConfig) -> Self {
        Self { config }
    }

    pub fn access_name(&self) -> &str {
        &self.config.name
    }

    pub fn refresh_name(&self) -> &str {
        &self.config.refresh_name
    }

    fn same_site(&self) -> SameSite {
        match self.config.same_site.as_str() {
            "Strict" => SameSite::Strict,
            "None" => SameSite::None,
            _ => SameSite::Lax,
        }
    }

    fn build(&self, name: &str, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::build((name.to_string(), value))
            .path(self.config.path.clone())
            .http_only(true)
            .secure(self.config.secure)
            .same_site(self.same_site())
            .build();
        if !self.config.domain.is_empty() {
            cookie.set_domain(self.config.domain.clone());
        }
        cookie
    }

    /// Add both token cookies, each living as long as its token
    pub fn set_tokens(
        &self,
        jar: CookieJar,
        access_token: String,
        access_ttl: chrono::Duration,
        refresh_token: String,
        refresh_ttl: chrono::Duration,
    ) -> CookieJar {
        let mut access = self.build(&self.config.name, access_token);
        access.set_max_age(time::Duration::seconds(access_ttl.num_seconds()));

        let mut refresh = self.build(&self.config.refresh_name, refresh_token);
        refresh.set_max_age(time::Duration::seconds(refresh_ttl.num_seconds()));

        jar.add(access).add(refresh)
    }

    /// Expire both token cookies on the client, whether or not the request sent them
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        let mut access = self.build(&self.config.name, String::new());
        access.make_removal();
        let mut refresh = self.build(&self.config.refresh_name, String::new());
        refresh.make_removal();
        jar.add(access).add(refresh)
    }

    pub fn access_token(&self, jar: &CookieJar) -> Option<String> {
        read(jar, &self.config.name)
    }

    pub fn refresh_token(&self, jar: &CookieJar) -> Option<String> {
        read(jar, &self.config.refresh_name)
    }
}

fn read(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
