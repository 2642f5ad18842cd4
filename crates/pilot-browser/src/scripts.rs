//! Page scripts. Each is a WebDriver script body, so values come back through
//! `return` and elements arrive as `arguments[i]`.

/// Hide the most obvious automation markers.
pub(crate) const STEALTH: &str = r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en'],
        configurable: true
    });
"#;

/// Attribute carrying the label on labelled elements.
pub(crate) const LABEL_ATTRIBUTE: &str = "data-pilot-label";

/// Drop the previous pass, then tag every visible interactive element with a
/// 0-based label in document order and draw a numbered box over it.
pub(crate) const LABEL_ELEMENTS: &str = r#"
    document.querySelectorAll('[data-pilot-overlay]').forEach(n => n.remove());
    document.querySelectorAll('[data-pilot-label]').forEach(n => n.removeAttribute('data-pilot-label'));

    const selector = 'a, button, input, textarea, select, [role="button"], [role="link"], [onclick]';
    const vw = window.innerWidth;
    const vh = window.innerHeight;
    const items = [];

    for (const el of document.querySelectorAll(selector)) {
        if (el.type === 'hidden') continue;
        const rect = el.getBoundingClientRect();
        if (rect.width < 2 || rect.height < 2) continue;
        if (rect.bottom < 0 || rect.right < 0 || rect.top > vh || rect.left > vw) continue;
        const style = window.getComputedStyle(el);
        if (style.visibility === 'hidden' || style.display === 'none' || parseFloat(style.opacity) === 0) continue;

        const label = String(items.length);
        el.setAttribute('data-pilot-label', label);

        const box = document.createElement('div');
        box.setAttribute('data-pilot-overlay', '');
        box.style.cssText = 'position:fixed;pointer-events:none;z-index:2147483647;border:2px solid #e4572e;'
            + 'left:' + rect.left + 'px;top:' + rect.top + 'px;width:' + rect.width + 'px;height:' + rect.height + 'px;';
        const tag = document.createElement('span');
        tag.textContent = label;
        tag.style.cssText = 'position:absolute;left:-2px;top:-16px;background:#e4572e;color:#fff;font:bold 12px sans-serif;padding:0 3px;';
        box.appendChild(tag);
        document.body.appendChild(box);

        const text = (el.innerText || el.value || el.getAttribute('aria-label') || el.getAttribute('placeholder') || '')
            .replace(/\s+/g, ' ').trim().slice(0, 200);
        items.push({ label: label, tag: el.tagName.toLowerCase(), text: text });
    }
    return items;
"#;

pub(crate) const CLEAR_OVERLAYS: &str =
    "document.querySelectorAll('[data-pilot-overlay]').forEach(n => n.remove());";

pub(crate) const SCROLL_INTO_VIEW: &str =
    "arguments[0].scrollIntoView({behavior: 'smooth', block: 'center'});";

pub(crate) const FORCE_SAME_TAB: &str = "arguments[0].setAttribute('target', '_self');";

pub(crate) const CLICK: &str = "arguments[0].click();";

pub(crate) const FOCUS: &str = "arguments[0].focus();";

pub(crate) const SUPPRESS_SPACE_SCROLL: &str = r#"
    window.onkeydown = function(e) {
        if (e.keyCode == 32 && e.target.type != 'text' && e.target.type != 'textarea' && e.target.type != 'search') {
            e.preventDefault();
        }
    };
"#;

pub(crate) const VIEWPORT_HEIGHT: &str = "return window.innerHeight;";

pub(crate) const PAGE_TEXT: &str = "return document.body ? document.body.innerText : '';";
