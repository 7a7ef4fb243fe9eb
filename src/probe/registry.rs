//! Built-in DPI target registry.
//!
//! Targets are spread across hosting providers so one provider's routing
//! quirks cannot dominate a profile's score. Every URL serves a resource
//! larger than the block-page window, so a truncated body stands out.

use super::target::DpiTarget;

struct Entry {
    id: &'static str,
    provider: &'static str,
    url: &'static str,
    times: u32,
}

const fn entry(id: &'static str, provider: &'static str, url: &'static str) -> Entry {
    Entry { id, provider, url, times: 1 }
}

const SUITE: &[Entry] = &[
    entry("US.CF-01", "Cloudflare", "https://cdn.cookielaw.org/scripttemplates/202501.2.0/otBannerSdk.js"),
    entry("US.CF-02", "Cloudflare", "https://genshin.jmp.blue/characters/all#"),
    entry("US.CF-03", "Cloudflare", "https://api.frankfurter.dev/v1/2000-01-01..2002-12-31"),
    Entry { id: "US.DO-01", provider: "DigitalOcean", url: "https://genderize.io/", times: 2 },
    entry("DE.HE-01", "Hetzner", "https://j.dejure.org/jcg/doctrine/doctrine_banner.webp"),
    entry("FI.HE-01", "Hetzner", "https://tcp1620-01.dubybot.live/1MB.bin"),
    entry("FI.HE-02", "Hetzner", "https://tcp1620-02.dubybot.live/1MB.bin"),
    entry("FI.HE-03", "Hetzner", "https://tcp1620-05.dubybot.live/1MB.bin"),
    entry("FI.HE-04", "Hetzner", "https://tcp1620-06.dubybot.live/1MB.bin"),
    entry("FR.OVH-01", "OVH", "https://eu.api.ovh.com/console/rapidoc-min.js"),
    entry("FR.OVH-02", "OVH", "https://ovh.sfx.ovh/10M.bin"),
    entry("SE.OR-01", "Oracle", "https://oracle.sfx.ovh/10M.bin"),
    entry("DE.AWS-01", "AWS", "https://tms.delta.com/delta/dl_anderson/Bootstrap.js"),
    entry(
        "US.AWS-01",
        "AWS",
        "https://corp.kaltura.com/wp-content/cache/min/1/wp-content/themes/airfleet/dist/styles/theme.css",
    ),
    entry("US.GC-01", "Google Cloud", "https://api.usercentrics.eu/gvl/v3/en.json"),
    entry("US.FST-01", "Fastly", "https://openoffice.apache.org/images/blog/rejected.png"),
    entry(
        "US.FST-02",
        "Fastly",
        "https://www.juniper.net/etc.clientlibs/juniper/clientlibs/clientlib-site/resources/fonts/lato/Lato-Regular.woff2",
    ),
    entry("PL.AKM-01", "Akamai", "https://www.lg.com/lg5-common-gp/library/jquery.min.js"),
    entry(
        "PL.AKM-02",
        "Akamai",
        "https://media-assets.stryker.com/is/image/stryker/gateway_1?$max_width_1410$",
    ),
    entry("US.CDN77-01", "CDN77", "https://cdn.eso.org/images/banner1920/eso2520a.jpg"),
    entry(
        "DE.CNTB-01",
        "Contabo",
        "https://cloudlets.io/wp-content/themes/Avada/includes/lib/assets/fonts/fontawesome/webfonts/fa-solid-900.woff2",
    ),
    entry("FR.SW-01", "Scaleway", "https://renklisigorta.com.tr/teklif-al"),
    entry(
        "US.CNST-01",
        "Constant",
        "https://cdn.xuansiwei.com/common/lib/font-awesome/4.7.0/fontawesome-webfont.woff2?v=4.7.0",
    ),
];

/// The registry as declared, before repeat expansion.
pub fn builtin_dpi_suite() -> Vec<DpiTarget> {
    SUITE
        .iter()
        .map(|e| DpiTarget::new(e.id, e.provider, e.url).repeated(e.times))
        .collect()
}

/// The registry expanded into one target per probe.
pub fn builtin_dpi_targets() -> Vec<DpiTarget> {
    super::target::expand_targets(&builtin_dpi_suite())
}
